//! Core conversion pipeline — scanning, extraction, resolution, mapping,
//! assembly. Pure text-in/structures-out; no I/O anywhere in this tree.

pub mod attributes;
pub mod mapper;
pub mod playbook;
pub mod recipe;
pub mod scanner;
pub mod template;
pub mod types;
