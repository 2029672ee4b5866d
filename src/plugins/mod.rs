pub mod physics;
pub mod portal;
pub mod raycast;
pub mod teleport;
pub mod transit;
