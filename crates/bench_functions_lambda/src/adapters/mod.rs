pub mod bridge;
pub mod clustering;
pub mod dataframe;
pub mod object_store;
