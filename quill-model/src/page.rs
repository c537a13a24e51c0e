/// Offset pagination request.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageRequest {
    pub from: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { from: 0, limit: 20 }
    }
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
}
