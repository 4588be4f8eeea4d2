mod check_config;
mod run;
mod table;

pub(crate) use check_config::cmd_check_config;
pub(crate) use run::cmd_run;
pub(crate) use table::cmd_table;
