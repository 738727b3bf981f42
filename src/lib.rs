pub mod ascii_frame;
pub mod clock;
pub mod error_codes;
pub mod events;
pub mod field;
pub mod navigator;
pub mod page;
pub mod renderer;
pub mod ripple;
pub mod scene;
pub mod schema;
pub mod section;
pub mod stage;
pub mod star_mask;
pub mod surface;
pub mod viewport;
