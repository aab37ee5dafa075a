//! Helpers for splitting raw response bytes

use tracing::debug;

use crate::response::error::ResponseError;
use crate::response::status::StatusWord;

/// Split raw response data into its trailing status word and the payload before it
///
/// # Errors
/// Returns [`ResponseError::Incomplete`] if the data cannot hold a status word.
pub fn extract_status_and_payload(data: &[u8]) -> Result<(StatusWord, &[u8]), ResponseError> {
    match data {
        [payload @ .., sw1, sw2] => Ok((StatusWord::new(*sw1, *sw2), payload)),
        _ => {
            debug!(len = data.len(), "Response too short for a status word");
            Err(ResponseError::Incomplete(data.len()))
        }
    }
}
