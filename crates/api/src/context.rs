use facturo_core::UserId;

/// Authenticated caller for a request.
///
/// Inserted by the auth middleware once the token is valid and the user still
/// exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
