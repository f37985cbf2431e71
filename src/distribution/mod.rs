mod d2q9;

pub use d2q9::D2Q9;
