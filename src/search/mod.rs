//! Candidate retrieval and fusion: the seed-mix optimizer.

pub mod dedup;
pub mod fusion;
pub mod lanes;

pub use dedup::limit_chunks_per_file;
pub use fusion::fuse;
pub use fusion::fuse_with_report;
pub use fusion::FusedCandidate;
pub use fusion::Lane;
pub use fusion::WeightMemo;
pub use lanes::run_lanes;
pub use lanes::LaneOutput;
pub use lanes::LaneRequest;
pub use lanes::LaneState;
pub use lanes::LaneStatus;
