use thiserror::Error;

use crate::flow::FlowError;
use crate::model::{ParseIdError, UnknownRoleError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    Role(#[from] UnknownRoleError),
    #[error(transparent)]
    Flow(#[from] FlowError),
}
