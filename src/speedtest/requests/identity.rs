use super::Request;
use crate::server::identity::ClientIdentity;
use std::borrow::Cow;

/// `GET /ip`
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Request for Identity {
    type Response = ClientIdentity;

    fn endpoint(&self) -> Cow<'_, str> {
        "ip".into()
    }
}
