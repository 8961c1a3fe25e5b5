use std::sync::Arc;

use session::{Component, ComponentTree, PageBean, PageInstance, Session};
use shared::{
    domain::{ClosePageMode, PathId},
    error::DispatchError,
    protocol::{actions, results, session_attrs},
    transfer::TransferNode,
};
use tracing::{debug, warn};

use crate::{
    context::{HintMode, RequestContext},
    registry::{ActionHandler, ControllerDef, PageHook},
};

/// Cross-page effect recorded while a page lock is held. Follow-ups run in
/// recording order once that lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    FireAction {
        path: String,
    },
    ClosePage {
        path_id: PathId,
    },
    SetProperty {
        path_id: PathId,
        property: String,
        values: Vec<String>,
    },
}

/// Everything an action handler or page hook may touch.
pub struct ActionContext<'a> {
    controller: &'a ControllerDef,
    page: &'a mut PageInstance,
    request: &'a mut RequestContext,
    session: &'a Session,
    followups: &'a mut Vec<FollowUp>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        controller: &'a ControllerDef,
        page: &'a mut PageInstance,
        request: &'a mut RequestContext,
        session: &'a Session,
        followups: &'a mut Vec<FollowUp>,
    ) -> Self {
        Self {
            controller,
            page,
            request,
            session,
            followups,
        }
    }

    pub fn controller(&self) -> &'a ControllerDef {
        self.controller
    }

    pub fn page(&self) -> &PageInstance {
        &*self.page
    }

    pub fn page_mut(&mut self) -> &mut PageInstance {
        self.page
    }

    pub fn bean_as<T: 'static>(&self) -> Option<&T> {
        self.page.bean_as::<T>()
    }

    pub fn bean_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.page.bean_as_mut::<T>()
    }

    pub fn request(&self) -> &RequestContext {
        &*self.request
    }

    pub fn request_mut(&mut self) -> &mut RequestContext {
        self.request
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }

    pub fn path_variable(&self) -> Option<&str> {
        self.page.path_parts().path_variable()
    }

    pub fn hint(&mut self, mode: HintMode, message: impl Into<String>) {
        self.request.add_hint(mode, message);
    }

    /// Names a widget the client saves before posting back from this content.
    pub fn add_on_save_id(&mut self, id: impl Into<String>) {
        self.request.add_on_save_id(id);
    }

    pub fn set_command_result(&mut self, result: impl Into<String>) {
        self.request.set_command_result(result);
    }

    /// Runs `path` against its own controller once this page is released.
    pub fn fire_controller_action(&mut self, path: impl Into<String>) {
        self.followups.push(FollowUp::FireAction { path: path.into() });
    }

    /// Writes a bean property of another live page once this page is released.
    pub fn set_controller_property(
        &mut self,
        path_id: impl Into<PathId>,
        property: impl Into<String>,
        values: Vec<String>,
    ) {
        self.followups.push(FollowUp::SetProperty {
            path_id: path_id.into(),
            property: property.into(),
            values,
        });
    }

    /// Records a path to replay after the next page open in this session.
    pub fn add_sticky_path(&mut self, path: impl Into<String>) {
        self.session.add_sticky_path(path);
    }

    /// Asks the client to post to `path` next.
    pub fn open_path(&mut self, path: impl Into<String>) -> String {
        self.request.set_post_response_path(path);
        results::POST_RESPONSE.to_string()
    }

    fn run_hook(&mut self, hook: Option<&PageHook>) -> Result<(), DispatchError> {
        match hook {
            Some(hook) => hook(self),
            None => Ok(()),
        }
    }
}

fn handler(
    f: impl Fn(&mut ActionContext<'_>) -> Result<String, DispatchError> + Send + Sync + 'static,
) -> ActionHandler {
    Arc::new(f)
}

/// Actions every controller starts from. Controllers may override any of them.
pub fn base_actions() -> Vec<(&'static str, ActionHandler)> {
    vec![
        (
            actions::INDEX_PAGE,
            handler(|ctx| {
                let hooks = ctx.controller().hooks();
                ctx.run_hook(hooks.on_index.as_ref())?;
                Ok(results::INDEX.to_string())
            }),
        ),
        (actions::OPEN_PAGE, handler(open_sequence)),
        (actions::REPLACE_PAGE, handler(open_sequence)),
        (
            actions::SAVE_PAGE,
            handler(|ctx| {
                let hooks = ctx.controller().hooks();
                ctx.run_hook(hooks.on_save.as_ref())?;
                Ok(results::SAVE.to_string())
            }),
        ),
        (
            actions::CLOSE_PAGE,
            handler(|_ctx| Ok(results::CLOSE.to_string())),
        ),
        (
            actions::NO_RESULT,
            handler(|_ctx| Ok(results::NONE.to_string())),
        ),
        (
            actions::CONTENT,
            handler(|_ctx| Ok(results::NONE.to_string())),
        ),
        (actions::COMMAND, handler(execute_command)),
        (
            actions::HIDE_POPUP,
            handler(|ctx| {
                ctx.session().remove_attribute(session_attrs::POPUP);
                Ok(results::HIDE_POPUP.to_string())
            }),
        ),
    ]
}

fn open_sequence(ctx: &mut ActionContext<'_>) -> Result<String, DispatchError> {
    let hooks = ctx.controller().hooks();
    ctx.run_hook(hooks.on_open.as_ref())?;
    ctx.run_hook(hooks.on_load.as_ref())?;
    if ctx.request.is_remote_viewer() {
        return Ok(results::REMOTE_VIEW.to_string());
    }
    Ok(results::OPEN.to_string())
}

/// Runs `action` on the locked page and returns the result name. Opening and
/// closing also maintain the document's content panel.
pub fn execute_action(ctx: &mut ActionContext<'_>, action: &str) -> Result<String, DispatchError> {
    let def = ctx.controller();
    let action_handler = def
        .action(action)
        .ok_or_else(|| DispatchError::UnknownAction {
            controller: def.name().to_string(),
            action: action.to_string(),
        })?;

    let result = action_handler(ctx)?;
    debug!(controller = %def.name(), action, result = %result, "action executed");

    match action {
        actions::OPEN_PAGE => place_opened_page(ctx, false)?,
        actions::REPLACE_PAGE => place_opened_page(ctx, true)?,
        actions::CLOSE_PAGE if result == results::CLOSE => {
            let mode = ClosePageMode::parse(ctx.request.target_value());
            perform_close(ctx, mode, true)?;
        }
        _ if result == results::CLOSE => perform_close(ctx, ClosePageMode::Close, false)?,
        _ => {}
    }
    Ok(result)
}

fn place_opened_page(ctx: &mut ActionContext<'_>, replace: bool) -> Result<(), DispatchError> {
    if !ctx.request.is_remote_viewer() {
        if let Some(document) = ctx.request.document().cloned() {
            let current = ctx.page.path_id().clone();
            let panel = ctx
                .session
                .content_panel(&document.path_parts.path_id, document.tabbed);
            let mut closed = {
                let mut panel = panel.lock();
                if replace {
                    let (replaced, mut discarded) = panel.insert_content(current.clone());
                    if let Some(replaced) = replaced {
                        panel.remove_content(std::slice::from_ref(&replaced));
                        discarded.push(replaced);
                    }
                    discarded
                } else {
                    panel.add_content(current.clone())
                }
            };
            closed.retain(|path_id| *path_id != current);
            ctx.request.add_closed_paths(closed);

            // Sticky paths replay only once the page sits in a content panel.
            for path in ctx.session.take_sticky_paths() {
                ctx.followups.push(FollowUp::FireAction { path });
            }
        }
        ctx.request.set_scroll_reset();
    }
    Ok(())
}

/// Closes the page under `mode`. With `fire` set, the page's own close hook runs
/// now and the hooks of every other cascaded page are queued.
pub fn perform_close(
    ctx: &mut ActionContext<'_>,
    mode: ClosePageMode,
    fire: bool,
) -> Result<(), DispatchError> {
    let current = ctx.page.path_id().clone();
    let on_close = ctx.controller().hooks().on_close.as_ref();
    let panel = if ctx.request.is_remote_viewer() {
        None
    } else {
        ctx.request
            .document()
            .and_then(|document| ctx.session.existing_content_panel(&document.path_parts.path_id))
    };

    let Some(panel) = panel else {
        if fire {
            ctx.run_hook(on_close)?;
        }
        ctx.request.add_closed_path(current);
        return Ok(());
    };

    let to_remove = panel.lock().evaluate_remove_content(&current, mode);
    if to_remove.is_empty() {
        debug!(path_id = %current, ?mode, "nothing to close");
        return Ok(());
    }

    if fire {
        for path_id in &to_remove {
            if *path_id == current {
                ctx.run_hook(on_close)?;
            } else {
                ctx.followups.push(FollowUp::ClosePage {
                    path_id: path_id.clone(),
                });
            }
        }
    }
    panel.lock().remove_content(&to_remove);
    debug!(path_id = %current, ?mode, closed = to_remove.len(), "pages closed");
    ctx.request.add_closed_paths(to_remove);
    Ok(())
}

fn execute_command(ctx: &mut ActionContext<'_>) -> Result<String, DispatchError> {
    let Some(command) = ctx.request.take_command() else {
        return Ok(results::COMMAND.to_string());
    };
    let locator = &command.locator;
    let (components, bean) = ctx.page.split_mut();

    let relay = match find_target(components, locator) {
        Some(target) => target.relay().map(str::to_string),
        None => {
            warn!(target_component = locator.long_name(), verb = %command.verb, "command target not found");
            return Ok(results::COMMAND.to_string());
        }
    };

    let target = match relay.as_deref() {
        Some(relay) => components.find_mut(relay).ok_or_else(|| {
            DispatchError::handler(format!(
                "component '{}' relays commands to missing component '{relay}'",
                locator.long_name()
            ))
        })?,
        None => find_target_mut(components, locator).ok_or_else(|| {
            DispatchError::handler(format!("component '{}' vanished", locator.long_name()))
        })?,
    };

    let index = command_index(locator);
    let outcome = run_command(target, &command.verb, index, bean)?;
    if let Some(result) = outcome {
        ctx.request.set_command_result(result);
    }
    Ok(ctx
        .request
        .take_command_result()
        .unwrap_or_else(|| results::COMMAND.to_string()))
}

fn run_command(
    target: &mut (dyn Component + 'static),
    verb: &str,
    index: Option<usize>,
    bean: &mut dyn PageBean,
) -> Result<Option<String>, DispatchError> {
    debug!(target_component = target.long_name(), verb, ?index, "component command");
    target.execute_command(verb, index, bean)
}

fn command_index(locator: &TransferNode) -> Option<usize> {
    locator
        .child_chain()
        .last()
        .and_then(TransferNode::item_index)
        .or(locator.item_index())
}

fn find_target<'t>(
    components: &'t ComponentTree,
    locator: &TransferNode,
) -> Option<&'t (dyn Component + 'static)> {
    let mut target = components.get(locator.long_name())?;
    for link in locator.child_chain() {
        target = target.child(link.id(), link.item_index())?;
    }
    Some(target)
}

fn find_target_mut<'t>(
    components: &'t mut ComponentTree,
    locator: &TransferNode,
) -> Option<&'t mut (dyn Component + 'static)> {
    let mut target = components.get_mut(locator.long_name())?;
    for link in locator.child_chain() {
        target = target.child_mut(link.id(), link.item_index())?;
    }
    Some(target)
}

#[cfg(test)]
#[path = "tests/action_tests.rs"]
mod tests;
