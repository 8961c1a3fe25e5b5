use std::{collections::VecDeque, sync::Arc};

use session::{SharedPage, Session};
use shared::{
    domain::{ControllerKind, ControllerName, ControllerPathParts},
    error::{ApiError, DispatchError},
    protocol::{actions, results, session_attrs, ClientRequest, ClientResponse},
};
use tracing::{debug, error, warn};

use crate::{
    action::{execute_action, ActionContext, FollowUp},
    config::DispatchConfig,
    context::{DocumentTarget, RequestContext},
    generators::STACK_TRACE_VISIBLE,
    path::{split_path, PathResolver},
    populate::populate,
    registry::{ControllerDef, ControllerRegistry, PageHook, ResultMapping},
    response::{assemble, GenerateContext, WriterPool},
    result::{resolve_result, ResolutionLevel},
    transfer::build_transfer,
    validation::validate,
};

const DEFAULT_CHARSET: &str = "UTF-8";

/// Request-to-response pipeline over an immutable controller registry.
pub struct Dispatcher {
    registry: Arc<ControllerRegistry>,
    resolver: PathResolver,
    config: DispatchConfig,
    writers: WriterPool,
}

impl Dispatcher {
    pub fn new(registry: Arc<ControllerRegistry>, config: DispatchConfig) -> Self {
        let resolver = PathResolver::new(registry.names().cloned());
        let writers = WriterPool::new(config.writer_pool_size);
        Self {
            registry,
            resolver,
            config,
            writers,
        }
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn writers(&self) -> &WriterPool {
        &self.writers
    }

    pub fn process(
        &self,
        session: &Session,
        request: &ClientRequest,
    ) -> Result<ClientResponse, DispatchError> {
        let mut response = ClientResponse::new();
        self.process_into(session, request, &mut response)?;
        Ok(response)
    }

    /// Runs one request into a response the caller may already have written to.
    /// Failures are rendered as an error page unless the response is committed.
    pub fn process_into(
        &self,
        session: &Session,
        request: &ClientRequest,
        response: &mut ClientResponse,
    ) -> Result<(), DispatchError> {
        let mut rc = RequestContext::new(request.remote_viewer().map(str::to_string));
        if let Some(charset) = request.charset.as_deref() {
            response.set_charset(charset);
        }

        let outcome = match self.dispatch(session, request, &mut rc, response) {
            Ok(()) => Ok(()),
            Err(err) => self.write_exception_response(session, request, &mut rc, response, err),
        };

        session.remove_pages(rc.closed_paths());
        debug!(
            path = %request.path,
            elapsed_ms = (chrono::Utc::now() - rc.started_at()).num_milliseconds(),
            "request finished"
        );
        rc.clear();
        outcome
    }

    fn dispatch(
        &self,
        session: &Session,
        request: &ClientRequest,
        rc: &mut RequestContext,
        response: &mut ClientResponse,
    ) -> Result<(), DispatchError> {
        let parts = self.resolver.resolve(&request.path)?;
        let def = self.registry.controller(&parts.controller_name)?;
        if def.is_secured() && !session.is_authenticated() {
            return Err(DispatchError::LoginRequired {
                path: request.path.clone(),
            });
        }
        rc.set_request_path_parts(parts.clone());

        let document = match request.document_path() {
            Some(path) => Some(self.load_document(session, path, rc)?),
            None => None,
        };

        let page = self.load_page(session, &def, &parts, rc)?;
        let tree = build_transfer(request, &def, rc)?;

        let validation_enabled = page.lock().is_validation_enabled();
        let mut followups = Vec::new();
        let result = if validate(&def, validation_enabled, &tree, rc) {
            let action = parts.action_name.as_deref().unwrap_or(actions::INDEX_PAGE);
            let mut guard = page.lock();
            let written = populate(&def, &mut guard, &tree)?;
            debug!(controller = %def.name(), written, "transfer populated");
            let mut ctx = ActionContext::new(&def, &mut guard, rc, session, &mut followups);
            execute_action(&mut ctx, action)?
        } else {
            debug!(controller = %def.name(), "validation failed, action skipped");
            results::VALIDATION_ERROR.to_string()
        };
        self.run_followups(session, rc, followups)?;

        let resolved = resolve_result(
            &self.registry,
            &def,
            document.as_ref().map(|(document_def, _)| document_def),
            &result,
        )?;
        let target = match resolved.level {
            ResolutionLevel::Executing => page,
            ResolutionLevel::Document => match document {
                Some((_, document_page)) => document_page,
                None => page,
            },
            ResolutionLevel::CommonUtilities => {
                let parts = split_path(self.registry.common_utilities().as_str())?;
                self.load_page(session, &resolved.controller, &parts, rc)?
            }
        };

        if resolved.mapping.is_reload() {
            let hook = resolved.controller.hooks().on_load.clone();
            self.run_page_hook(session, rc, &resolved.controller, &target, hook.as_ref())?;
        }

        let response_parts = target.lock().path_parts().clone();
        rc.set_response_path_parts(response_parts);
        self.write_response(session, rc, response, &resolved.mapping, &target)
    }

    fn load_document(
        &self,
        session: &Session,
        path: &str,
        rc: &mut RequestContext,
    ) -> Result<(Arc<ControllerDef>, SharedPage), DispatchError> {
        let parts = self.resolver.resolve(path)?;
        let def = self.registry.controller(&parts.controller_name)?;
        if def.kind() != ControllerKind::Document {
            return Err(DispatchError::MalformedPath {
                path: path.to_string(),
            });
        }
        let page = self.load_page(session, &def, &parts, rc)?;
        rc.set_document(DocumentTarget {
            path_parts: page_parts(&parts),
            tabbed: def.is_tabbed(),
        });
        Ok((def, page))
    }

    /// Fetches the page instance for `parts`, creating it on first access. The
    /// init hook runs under the page lock before any request can use the page.
    fn load_page(
        &self,
        session: &Session,
        def: &Arc<ControllerDef>,
        parts: &ControllerPathParts,
        rc: &mut RequestContext,
    ) -> Result<SharedPage, DispatchError> {
        let (page, _) =
            session.page_or_create(&parts.path_id, || Ok(def.create_page(page_parts(parts))))?;
        let mut followups = Vec::new();
        {
            let mut guard = page.lock();
            if !guard.is_initialized() {
                if let Some(hook) = def.hooks().on_init.as_ref() {
                    let mut ctx = ActionContext::new(def, &mut guard, rc, session, &mut followups);
                    hook(&mut ctx)?;
                }
                guard.mark_initialized();
                debug!(path_id = %parts.path_id, "page initialized");
            }
        }
        self.run_followups(session, rc, followups)?;
        Ok(page)
    }

    fn run_page_hook(
        &self,
        session: &Session,
        rc: &mut RequestContext,
        def: &Arc<ControllerDef>,
        page: &SharedPage,
        hook: Option<&PageHook>,
    ) -> Result<(), DispatchError> {
        let Some(hook) = hook else {
            return Ok(());
        };
        let mut followups = Vec::new();
        {
            let mut guard = page.lock();
            let mut ctx = ActionContext::new(def, &mut guard, rc, session, &mut followups);
            hook(&mut ctx)?;
        }
        self.run_followups(session, rc, followups)
    }

    /// Drains queued cross-page effects in order. Effects produced while running
    /// one are appended behind the ones already queued.
    fn run_followups(
        &self,
        session: &Session,
        rc: &mut RequestContext,
        followups: Vec<FollowUp>,
    ) -> Result<(), DispatchError> {
        let mut queue: VecDeque<FollowUp> = followups.into();
        while let Some(followup) = queue.pop_front() {
            let mut produced = Vec::new();
            match followup {
                FollowUp::FireAction { path } => {
                    let parts = self.resolver.resolve(&path)?;
                    let def = self.registry.controller(&parts.controller_name)?;
                    let mut side = RequestContext::new(rc.remote_viewer().map(str::to_string));
                    let page = self.load_page(session, &def, &parts, &mut side)?;
                    let action = parts.action_name.as_deref().unwrap_or(actions::INDEX_PAGE);
                    let result = {
                        let mut guard = page.lock();
                        let mut ctx =
                            ActionContext::new(&def, &mut guard, &mut side, session, &mut produced);
                        execute_action(&mut ctx, action)?
                    };
                    debug!(path = %path, result = %result, "follow-up action fired");
                    rc.add_closed_paths(side.closed_paths().to_vec());
                    for hint in side.take_hints() {
                        rc.add_hint(hint.mode, hint.message);
                    }
                }
                FollowUp::ClosePage { path_id } => {
                    let Some(page) = session.page(&path_id) else {
                        debug!(path_id = %path_id, "cascaded page already gone");
                        continue;
                    };
                    let def = self.registry.controller(page.lock().controller_name())?;
                    if let Some(hook) = def.hooks().on_close.as_ref() {
                        let mut guard = page.lock();
                        let mut ctx =
                            ActionContext::new(&def, &mut guard, rc, session, &mut produced);
                        hook(&mut ctx)?;
                    }
                }
                FollowUp::SetProperty {
                    path_id,
                    property,
                    values,
                } => match session.page(&path_id) {
                    Some(page) => page
                        .lock()
                        .bean_mut()
                        .write_property(&property, None, &values)?,
                    None => warn!(path_id = %path_id, property = %property, "property target page is not live"),
                },
            }
            queue.extend(produced);
        }
        Ok(())
    }

    fn write_response(
        &self,
        session: &Session,
        rc: &mut RequestContext,
        response: &mut ClientResponse,
        mapping: &ResultMapping,
        target: &SharedPage,
    ) -> Result<(), DispatchError> {
        let mut writer = self.writers.acquire();
        {
            let guard = target.lock();
            let mut ctx = GenerateContext {
                page: &*guard,
                request: &mut *rc,
                session,
            };
            assemble(&mut writer, mapping, &mut ctx)?;
        }

        response.set_content_type(mapping.content_kind().mime_type());
        if response.charset().is_none() {
            response.set_charset(DEFAULT_CHARSET);
        }
        for (name, value) in &self.config.response_headers {
            response.set_header(name.as_str(), value.as_str());
        }
        if self.config.csp_nonce {
            let nonce = rc.nonce();
            response.set_header(
                "Content-Security-Policy",
                format!("script-src 'self' 'nonce-{nonce}'; style-src 'self' 'nonce-{nonce}'"),
            );
        }
        response.write(writer.as_str());
        Ok(())
    }

    fn write_exception_response(
        &self,
        session: &Session,
        request: &ClientRequest,
        rc: &mut RequestContext,
        response: &mut ClientResponse,
        err: DispatchError,
    ) -> Result<(), DispatchError> {
        error!(path = %request.path, code = ?err.code(), error = %err, "request failed");
        if response.is_committed() {
            return Err(DispatchError::ResponseCommitted {
                source: Box::new(err),
            });
        }

        let login_required = err.is_login_required();
        if login_required {
            session.set_authenticated(false);
        }
        let api_error = serde_json::to_value(ApiError::from(&err))
            .map_err(|encode| DispatchError::Generation(encode.to_string()))?;
        session.set_attribute(session_attrs::LOGIN_REQUIRED, login_required);
        session.set_attribute(session_attrs::EXCEPTION_MESSAGE, err.to_string());
        session.set_attribute(session_attrs::EXCEPTION_STACKTRACE, err.trace());
        session.set_attribute(session_attrs::EXCEPTION_ERROR, api_error);

        let fresh_navigation = request.document_path().is_none() && !rc.is_remote_viewer();
        let (name, result) = if fresh_navigation && self.config.friendly_redirect {
            (self.registry.unauthorized(), results::INDEX)
        } else {
            (self.registry.system_info(), results::SHOW_SYSTEM_EXCEPTION)
        };
        let (parts, page, mapping) = self.error_page(session, name, result)?;
        page.lock().set_attribute(
            STACK_TRACE_VISIBLE,
            !login_required && !self.config.hide_error_trace,
        );
        rc.set_response_path_parts(parts);
        self.write_response(session, rc, response, &mapping, &page)
    }

    /// Error pages are created without running any hook.
    fn error_page(
        &self,
        session: &Session,
        name: &ControllerName,
        result: &str,
    ) -> Result<(ControllerPathParts, SharedPage, Arc<ResultMapping>), DispatchError> {
        let def = self.registry.controller(name)?;
        let mapping = def
            .result(result)
            .cloned()
            .ok_or_else(|| DispatchError::UnresolvedResult {
                controller: name.to_string(),
                result: result.to_string(),
            })?;
        let parts = split_path(name.as_str())?;
        let (page, _) = session.page_or_create(&parts.path_id, || Ok(def.create_page(parts.clone())))?;
        Ok((parts, page, mapping))
    }
}

/// Path parts a page instance is stored under: the path id without the action.
fn page_parts(parts: &ControllerPathParts) -> ControllerPathParts {
    ControllerPathParts {
        controller_path: parts.path_id.to_string(),
        action_name: None,
        ..parts.clone()
    }
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
