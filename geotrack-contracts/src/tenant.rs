use geotrack_model::TenantId;

/// Source of the active dealer id, usually backed by local persisted settings.
pub trait TenantSource: Send + Sync {
    fn tenant_id(&self) -> Option<TenantId>;
}

/// Tenant source returning a fixed id, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticTenant(pub Option<TenantId>);

impl StaticTenant {
    pub fn new(tenant: impl Into<TenantId>) -> Self {
        Self(Some(tenant.into()))
    }

    pub fn unset() -> Self {
        Self(None)
    }
}

impl TenantSource for StaticTenant {
    fn tenant_id(&self) -> Option<TenantId> {
        self.0.clone()
    }
}
