pub mod board;
pub mod repo;
