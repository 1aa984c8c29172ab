pub mod set;
