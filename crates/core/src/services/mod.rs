//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod email;
pub mod following;
pub mod group;
pub mod post;
pub mod user;

pub use comment::{CommentInput, CommentService, CommentView};
pub use email::{EmailMessage, EmailService};
pub use following::{FollowOutcome, FollowingService, UnfollowOutcome};
pub use group::{CreateGroupInput, GroupService};
pub use post::{EditOutcome, ImageUpload, PostInput, PostService, PostView};
pub use user::{
    PasswordChangeInput, PasswordResetInput, SetPasswordInput, SignupInput, UserService,
};
