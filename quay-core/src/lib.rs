mod as_value;
mod connection;
mod driver;
mod error;
mod from_value;
mod pool;
mod query;
mod table_writer;
mod transaction;
mod util;
mod value;

pub use ::anyhow::Context as ErrorContext;
pub use as_value::*;
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use from_value::*;
pub use pool::*;
pub use query::*;
pub use table_writer::*;
pub use transaction::*;
pub use util::*;
pub use value::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
