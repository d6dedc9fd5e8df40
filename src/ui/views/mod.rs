mod bookmarks;
mod outbox;
mod stories;

pub use bookmarks::draw_bookmarks;
pub use outbox::draw_outbox;
pub use stories::draw_story_list;
