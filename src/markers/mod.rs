pub mod conda_build_tag;
pub mod pep508;
pub mod platform_filter;
