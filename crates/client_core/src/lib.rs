//! Client core for the document analysis service: transport, session state
//! machine, raw export, and the view model a front end renders.

pub mod error;
pub mod export;
pub mod response;
pub mod session;
pub mod transport;
pub mod view;

pub use error::{ErrorKind, SessionError};
pub use export::{ExportError, RawExport, RAW_EXPORT_FILE_NAME};
pub use session::{
    parse_field_spec, OrderingPolicy, SelectedFile, SessionController, SessionState,
};
pub use transport::{
    AnalysisTransport, FilePart, HttpTransport, Payload, TransportError, TransportResponse,
};
pub use view::SessionView;
