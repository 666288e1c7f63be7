//! Built-in step handlers.
//!
//! Each tool takes typed, already template-resolved parameters:
//! - `generate`: text generation via a host-supplied [`TextGenerator`]
//! - `file-operation`: read/write/list/exists over a [`Storage`](crate::storage::Storage) root
//! - `remote-call`: HTTP requests
//! - `transform`: expressions or named functions over one context variable

pub mod file;
pub mod generate;
pub mod http;
pub mod transform;

pub use file::{FileOperation, FileParams, FileTool};
pub use generate::{GenerateParams, GenerateTool, HttpTextGenerator, TextGenerator};
pub use http::{HttpMethod, HttpTool, RemoteCallParams};
pub use transform::{TransformFn, TransformParams, TransformTool};
