/*!
Semantic UI roles.

Roles describe what an element *is* in the captured hierarchy. The automation
runtime reports a numeric element type per node; [`Role::from_element_type`]
folds those into a smaller, stable vocabulary.
*/

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Semantic UI role.
///
/// Collapses the runtime's ~80 element types into the roles callers actually
/// branch on. The raw type is kept on [`crate::Element::element_type`] for
/// debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
  // === Structural / Containers ===
  Application,
  Window,
  Alert,
  Group,
  ScrollArea,
  NavigationBar,
  TabBar,
  Toolbar,
  Keyboard,
  WebView,

  // === Collections ===
  Table,
  Cell,
  CollectionView,

  // === Interactive ===
  Button,
  Link,
  TextField,
  SecureTextField,
  TextView,
  SearchField,
  Switch,
  Slider,
  Stepper,
  Picker,
  SegmentedControl,
  Key,

  // === Static content ===
  StaticText,
  Image,
  ProgressIndicator,

  /// Layout-only node the runtime reports as "other".
  Other,

  /// Element type that isn't mapped to anything above.
  #[default]
  Unknown,
}

impl Role {
  /// Map a raw runtime element type to a role.
  ///
  /// # Example
  ///
  /// ```
  /// use quiesce::a11y::Role;
  ///
  /// assert_eq!(Role::from_element_type(9), Role::Button);
  /// assert_eq!(Role::from_element_type(48), Role::StaticText);
  /// assert_eq!(Role::from_element_type(9999), Role::Unknown);
  /// ```
  pub const fn from_element_type(raw: u32) -> Self {
    match raw {
      1 => Self::Other,
      2 => Self::Application,
      3 | 11 | 64 => Self::Group,
      4 | 5 | 8 => Self::Window,
      7 => Self::Alert,
      9 | 14 | 16 | 17 | 59 | 60 => Self::Button,
      10 | 12 | 40 | 41 => Self::Switch,
      19 => Self::Keyboard,
      20 => Self::Key,
      21 => Self::NavigationBar,
      22 | 23 => Self::TabBar,
      24 => Self::Toolbar,
      26 | 29 => Self::Table,
      27 | 30 | 75 => Self::Cell,
      32 => Self::CollectionView,
      33 => Self::Slider,
      35 | 36 => Self::ProgressIndicator,
      37 => Self::SegmentedControl,
      38 | 39 | 51 => Self::Picker,
      42 => Self::Link,
      43 | 44 => Self::Image,
      45 => Self::SearchField,
      46 => Self::ScrollArea,
      48 => Self::StaticText,
      49 => Self::TextField,
      50 => Self::SecureTextField,
      52 => Self::TextView,
      58 => Self::WebView,
      79 => Self::Stepper,
      _ => Self::Unknown,
    }
  }

  /// Does this role typically contain other elements?
  pub const fn is_container(&self) -> bool {
    matches!(
      self,
      Self::Application
        | Self::Window
        | Self::Alert
        | Self::Group
        | Self::ScrollArea
        | Self::NavigationBar
        | Self::TabBar
        | Self::Toolbar
        | Self::Keyboard
        | Self::WebView
        | Self::Table
        | Self::Cell
        | Self::CollectionView
        | Self::Other
    )
  }

  /// Is this an element users can tap or otherwise activate?
  pub const fn is_interactive(&self) -> bool {
    matches!(
      self,
      Self::Button
        | Self::Link
        | Self::TextField
        | Self::SecureTextField
        | Self::TextView
        | Self::SearchField
        | Self::Switch
        | Self::Slider
        | Self::Stepper
        | Self::Picker
        | Self::SegmentedControl
        | Self::Key
        | Self::Cell
    )
  }

  /// Is this a text input element?
  pub const fn is_text_input(&self) -> bool {
    matches!(
      self,
      Self::TextField | Self::SecureTextField | Self::TextView | Self::SearchField
    )
  }

  /// Is this a placeholder role that carries no semantics?
  pub const fn is_generic(&self) -> bool {
    matches!(self, Self::Other | Self::Unknown)
  }
}
