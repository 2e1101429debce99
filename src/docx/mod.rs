pub mod body;
pub mod locate;
pub mod package;
pub mod rels;
pub mod xml;
