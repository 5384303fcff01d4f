pub mod csv_table;
pub mod etl;
pub mod extract;
pub mod load;
pub mod pipeline;
pub mod schedule;
pub mod transform;

pub use crate::domain::model::{
    LoadJob, Table, TableRef, TimestampCell, TransformOutput, TransformSummary,
};
pub use crate::domain::ports::{Pipeline, Storage, Warehouse};
pub use crate::utils::error::Result;
