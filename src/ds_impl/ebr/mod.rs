pub mod concurrent_set;

pub mod list;
pub mod markable;
pub mod set;

pub use self::concurrent_set::ConcurrentSet;

pub use self::list::List;
pub use self::markable::MarkableRef;
pub use self::set::LockFreeSet;
