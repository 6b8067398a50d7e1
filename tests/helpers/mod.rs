pub mod builders;
pub mod db;
pub mod graph;

#[allow(unused_imports)]
pub use builders::RecordBuilder;
pub use db::TestDb;
