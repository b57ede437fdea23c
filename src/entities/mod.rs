pub mod actor;
pub mod category;
pub mod contact;
pub mod genre;
pub mod movie;
pub mod movie_actor;
pub mod movie_director;
pub mod movie_genre;
pub mod movie_shots;
pub mod rating;
pub mod rating_star;
pub mod reviews;
