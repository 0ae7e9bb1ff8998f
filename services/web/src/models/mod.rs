pub mod booking;
pub mod review;
pub mod tour;
pub mod user;

pub use booking::{Booking, BookingInput, BookingRow, NewBooking};
pub use review::{NewReview, Review, ReviewAuthor, ReviewInput, ReviewRow, ReviewUpdate};
pub use tour::{Difficulty, Location, Tour, TourDraft, TourInput, TourRow};
pub use user::{
    NewUser, PasswordInput, Role, SignupInput, User, UserChanges, UserRow, UserSummary,
    UserUpdate,
};
