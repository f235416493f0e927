//! Processing of URLs written into rendered responses.
//!
//! Templates call these processors while a [`DataComposer`](crate::DataComposer)
//! has a started page:
//! - [`LinkUrlProcessor`] for links and redirects, which get a GET state and
//!   the state parameter appended
//! - [`FormUrlProcessor`] for form actions, which begin a state the form's
//!   fields are then composed into
//!
//! External URLs, start pages, excluded extensions and unprotected URLs are
//! rendered unchanged.

mod form;
mod link;
mod url_data;

pub use form::{FormAction, FormUrlProcessor};
pub use link::LinkUrlProcessor;
pub use url_data::UrlData;
