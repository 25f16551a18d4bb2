//! Definition sources — modules of related bean registrations.
//!
//! A source groups the definitions of one domain area so that wiring
//! does not pile up in a single registration block.
//!
//! # Examples
//! ```rust,ignore
//! struct MailModule;
//!
//! impl DefinitionSource for MailModule {
//!     fn definitions(&self) -> Result<Vec<BeanDefinition>> {
//!         Ok(vec![
//!             BeanDefinition::builder::<SmtpConfig>("smtpConfig")
//!                 .construct(SmtpConfig::default)
//!                 .value("host", "${smtp.host}", |c: &mut SmtpConfig, v: String| c.host = v)
//!                 .build()?,
//!             BeanDefinition::builder::<SmtpMailer>("mailService")
//!                 .construct(|| SmtpMailer)
//!                 .bind(|m: Arc<SmtpMailer>| m as Arc<dyn Mailer>)
//!                 .build()?,
//!         ])
//!     }
//! }
//! ```

use crate::definition::BeanDefinition;
use crate::error::Result;

/// A module that contributes bean definitions to a container.
///
/// Sources are drained once, during [`ContainerBuilder::build`];
/// their definitions go through the same duplicate and finalization
/// checks as directly registered ones.
///
/// [`ContainerBuilder::build`]: crate::container::ContainerBuilder::build
pub trait DefinitionSource {
    /// Produce this module's definitions.
    ///
    /// # Errors
    /// Propagates builder errors such as a malformed value expression.
    fn definitions(&self) -> Result<Vec<BeanDefinition>>;

    /// Human-readable name used in bootstrap logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
