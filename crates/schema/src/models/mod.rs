mod chapter;
mod comic;
mod refs;
mod status;
mod user;

pub use self::chapter::Chapter;
pub use self::comic::Comic;
pub use self::refs::{ComicRef, ImageRef, NamedRef};
pub use self::status::{ComicStatus, Role};
pub use self::user::User;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('/', "").replace('-', "").replace('_', "").replace(' ', "")
}
