pub mod classifier;
pub mod query;
pub mod queue;
pub mod storage;
pub mod submission;
pub mod verdict;
pub mod worker;
