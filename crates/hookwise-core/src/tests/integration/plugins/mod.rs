// Registry flows exercised end to end against a temporary plugins root
pub mod install;
pub mod lifecycle;
pub mod storage;
