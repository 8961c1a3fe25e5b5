pub mod bean;
pub mod component;
pub mod page;
pub mod panel;
pub mod store;

pub use bean::{BeanFactory, MapBean, PageBean};
pub use component::{
    CommandHandler, CommandOutcome, Component, ComponentFactory, ComponentTree, Container, Field,
};
pub use page::{PageInstance, SharedPage};
pub use panel::ContentPanel;
pub use store::{Session, SessionStore, SharedPanel};
