pub(crate) mod op_config_manager;
pub(crate) mod session_manager;
