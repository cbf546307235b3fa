//! 内置浏览器动作

pub mod content;
pub mod done;
pub mod interaction;
pub mod navigation;
pub mod scroll;
pub mod tabs;

pub use content::CacheContentAction;
pub use done::DoneAction;
pub use interaction::{
    ClickElementAction, GetDropdownOptionsAction, InputTextAction, SelectDropdownOptionAction,
    SendKeysAction,
};
pub use navigation::{GoBackAction, GoToUrlAction, SearchGoogleAction, WaitAction};
pub use scroll::{ScrollAction, ScrollToTextAction};
pub use tabs::{CloseTabAction, OpenTabAction, SwitchTabAction};

use crate::core::AgentError;
use crate::tools::ActionRegistry;

/// 注册全部内置动作（顺序即 prompt 中的展示顺序）
pub fn register_builtin(registry: &mut ActionRegistry) -> Result<(), AgentError> {
    registry.register(DoneAction)?;
    registry.register(SearchGoogleAction)?;
    registry.register(GoToUrlAction)?;
    registry.register(GoBackAction)?;
    registry.register(WaitAction)?;
    registry.register(ClickElementAction)?;
    registry.register(InputTextAction)?;
    registry.register(SwitchTabAction)?;
    registry.register(OpenTabAction)?;
    registry.register(CloseTabAction)?;
    registry.register(CacheContentAction)?;
    registry.register(ScrollAction::down())?;
    registry.register(ScrollAction::up())?;
    registry.register(SendKeysAction)?;
    registry.register(ScrollToTextAction)?;
    registry.register(GetDropdownOptionsAction)?;
    registry.register(SelectDropdownOptionAction)?;
    Ok(())
}
