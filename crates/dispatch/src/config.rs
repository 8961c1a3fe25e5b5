/// Runtime switches of the dispatch pipeline. Built by the host from its own
/// settings; the pipeline never reads configuration sources itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub common_utilities_controller: String,
    pub unauthorized_controller: String,
    pub system_info_controller: String,
    pub friendly_redirect: bool,
    pub hide_error_trace: bool,
    pub csp_nonce: bool,
    pub response_headers: Vec<(String, String)>,
    pub writer_pool_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            common_utilities_controller: "/commonutilities".to_string(),
            unauthorized_controller: "/unauthorized".to_string(),
            system_info_controller: "/systeminfo".to_string(),
            friendly_redirect: true,
            hide_error_trace: false,
            csp_nonce: false,
            response_headers: Vec::new(),
            writer_pool_size: 16,
        }
    }
}
