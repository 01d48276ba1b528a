pub mod jwt;

pub use jwt::{authorize, bearer_token, validate_token, Claims};
