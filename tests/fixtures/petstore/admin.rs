#[derive(Serialize)]
pub struct Response {
    pub total: u64,
}

/// @Summary Store statistics
/// @Tags admin
/// @Success 200 {object} Response
/// @Router /admin/stats [get]
pub fn stats() {}
