pub mod recommendationdtos;
