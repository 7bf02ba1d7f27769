//! Internal building blocks (object model, index, pack, object database,
//! zlib) that power the public repository APIs.

pub mod index;
pub mod object;
pub mod odb;
pub mod pack;
pub mod zlib;
