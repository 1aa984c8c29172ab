pub mod ebr;
