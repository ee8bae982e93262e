mod link;

pub use link::{
    CreateLinkRequest, CreateRuleRequest, CreateVariantRequest, ShortLink, UpdateLinkRequest,
    UpdateRuleRequest, UpdateVariantRequest,
};
