pub mod cat;
pub mod chmod;
pub mod chown;
pub mod cp;
pub mod find;
pub mod grep;
pub mod index;
pub mod init;
pub mod ln;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod reindex;
pub mod rm;
pub mod rmdir;
pub mod search;
pub mod stat;
pub mod touch;
pub mod tree;
pub mod vol;
pub mod vsearch;
pub mod write;

pub use cat::cat_command;
pub use chmod::chmod_command;
pub use chown::chown_command;
pub use cp::cp_command;
pub use find::find_command;
pub use grep::grep_command;
pub use index::{index_create, index_drop, index_status};
pub use init::init_command;
pub use ln::{ln_command, readlink_command};
pub use ls::ls_command;
pub use mkdir::mkdir_command;
pub use mv::mv_command;
pub use reindex::reindex_command;
pub use rm::rm_command;
pub use rmdir::rmdir_command;
pub use search::search_command;
pub use stat::stat_command;
pub use touch::touch_command;
pub use tree::tree_command;
pub use vol::{vol_create, vol_info, vol_list};
pub use vsearch::vsearch_command;
pub use write::{append_command, write_command};
