pub mod describe;
pub mod list;
pub mod run;
pub mod schema;
