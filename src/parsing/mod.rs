pub mod mokuro;

pub use mokuro::{find_mokuro_file, ingest_volume};
