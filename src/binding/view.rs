use serde_json::{Map, Value};

/// Properties handed to a view: named JSON values.
pub type Props = Map<String, Value>;

/// A view component that can be wrapped by a binding.
///
/// `render` receives the owner's props merged with one entry per mapping
/// property. It is never called while the binding is still waiting for its
/// required keys, so a view can assume its bound properties are present.
pub trait View: Send + Sync + 'static {
    fn render(&self, props: &Props);
}

/// Adapter turning a closure into a [`View`].
///
/// ```
/// use tether::binding::{FnView, Props};
///
/// let view = FnView::new(|props: &Props| {
///     println!("rendering with {} props", props.len());
/// });
/// # let _ = view;
/// ```
pub struct FnView<F>(F);

impl<F> FnView<F>
where
    F: Fn(&Props) + Send + Sync + 'static,
{
    pub fn new(render: F) -> Self {
        Self(render)
    }
}

impl<F> View for FnView<F>
where
    F: Fn(&Props) + Send + Sync + 'static,
{
    fn render(&self, props: &Props) {
        (self.0)(props)
    }
}
