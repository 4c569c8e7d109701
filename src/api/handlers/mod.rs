pub mod authenticate;
pub mod health;
pub mod root;
