use uuid::Uuid;

/// Supplies the acting identity for audit stamping.
///
/// Implementations never fail; anonymous contexts return `None` and audit
/// columns stay null.
pub trait CurrentActor: Send + Sync {
    fn current_user_id(&self) -> Option<Uuid>;
}

/// Actor pinned at construction time. Request-scoped callers build one per
/// operation from the authenticated principal; tests pass whatever identity
/// the scenario needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedActor(pub Option<Uuid>);

impl FixedActor {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn user(id: Uuid) -> Self {
        Self(Some(id))
    }
}

impl CurrentActor for FixedActor {
    fn current_user_id(&self) -> Option<Uuid> {
        self.0
    }
}
