//! The dependency mapping catalog
//!
//! A fixed, append-only table mapping Windows library names to the
//! runtime components that provide them. One component per dependency
//! family: the whole Visual C++ 2015-2019 redistributable family maps to
//! `vcrun2019`, every Direct3D 11 entry point maps to `dxvk`, and so on.
//!
//! Components are installed in a declared fixed order (class rank, then
//! identifier), not in resolver-discovery order, so repeated installs of
//! the same target are reproducible. Entries marked
//! [`Provenance::BaseRuntime`] are provided by the runner itself and are
//! reported without ever being installed.
//!
//! Only verbs that actually exist in winetricks are listed; graphics
//! translation components (`dxvk`, `vkd3d`, `dxvk-nvapi`) install through
//! the environment manager instead. A library with no entry here is
//! reported as unresolved and ignored during installation.

use std::cmp::Ordering;

use crate::models::Provenance;

/// Install-order grouping for catalog components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentClass {
    /// Vulkan translation layers, installed through the manager
    GraphicsTranslation,
    /// Visual C++ runtime redistributables
    CppRuntime,
    /// .NET runtimes
    DotNet,
    /// Legacy Direct3D helper libraries
    Direct3d,
    /// Input device libraries
    Input,
    /// Audio and video codec libraries
    Media,
    /// Physics and VR acceleration libraries
    Physics,
    /// Store and platform loaders
    Platform,
    /// Miscellaneous system libraries
    System,
    /// Font packages
    Fonts,
    /// Shipped with the base runtime
    Builtin,
}

impl ComponentClass {
    /// Position of this class in the fixed install order.
    pub const fn install_rank(self) -> u8 {
        match self {
            Self::GraphicsTranslation => 0,
            Self::CppRuntime => 1,
            Self::DotNet => 2,
            Self::Direct3d => 3,
            Self::Input => 4,
            Self::Media => 5,
            Self::Physics => 6,
            Self::Platform => 7,
            Self::System => 8,
            Self::Fonts => 9,
            Self::Builtin => 10,
        }
    }
}

/// A catalog component: identifier, install-order class, and whether the
/// base runtime already provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Canonical identifier (winetricks verb or manager component name)
    pub id: &'static str,
    /// Install-order grouping
    pub class: ComponentClass,
    /// Whether an install is required
    pub provided_by: Provenance,
}

const fn must(id: &'static str, class: ComponentClass) -> ComponentSpec {
    ComponentSpec {
        id,
        class,
        provided_by: Provenance::MustInstall,
    }
}

const BUILTIN: ComponentSpec = ComponentSpec {
    id: "wine-builtin",
    class: ComponentClass::Builtin,
    provided_by: Provenance::BaseRuntime,
};

use ComponentClass::{
    CppRuntime, Direct3d, DotNet, Fonts, GraphicsTranslation, Input, Media, Physics, Platform,
    System,
};

/// Library name (lowercase) to component mapping. Append-only.
static DLL_MAP: &[(&str, ComponentSpec)] = &[
    // DirectX / graphics - DXVK handles d3d11/d3d12 translation to Vulkan
    ("d3d9.dll", must("d3dx9", Direct3d)),
    ("d3d10.dll", must("d3dx10", Direct3d)),
    ("d3d11.dll", must("dxvk", GraphicsTranslation)),
    ("d3d11_1.dll", must("dxvk", GraphicsTranslation)),
    ("d3d11_2.dll", must("dxvk", GraphicsTranslation)),
    ("d3d11_3.dll", must("dxvk", GraphicsTranslation)),
    ("d3d11_4.dll", must("dxvk", GraphicsTranslation)),
    ("d3d12.dll", must("vkd3d", GraphicsTranslation)),
    ("dxgi.dll", must("dxvk", GraphicsTranslation)),
    ("d3dcompiler_43.dll", must("d3dcompiler_43", Direct3d)),
    ("d3dcompiler_47.dll", must("d3dcompiler_47", Direct3d)),
    // Input and audio
    ("xinput1_3.dll", must("xinput", Input)),
    ("xinput1_4.dll", must("xinput", Input)),
    ("dinput8.dll", must("dinput", Input)),
    ("openal32.dll", must("openal", Media)),
    ("fmod.dll", must("fmod", Media)),
    ("fmodex.dll", must("fmod", Media)),
    // Video codecs
    ("binkw32.dll", must("bink", Media)),
    ("binkw64.dll", must("bink", Media)),
    ("bink2w32.dll", must("bink2", Media)),
    ("bink2w64.dll", must("bink2", Media)),
    // Physics and acceleration
    ("physxloader.dll", must("physx", Physics)),
    ("physx3_x86.dll", must("physx", Physics)),
    ("physx3_x64.dll", must("physx", Physics)),
    ("openvr_api.dll", must("openvr", Physics)),
    ("nvapi.dll", must("dxvk-nvapi", GraphicsTranslation)),
    // Store and platform loaders
    ("ubiorbitapi_r2.dll", must("ubisoftconnect", Platform)),
    ("uplay_r1.dll", must("ubisoftconnect", Platform)),
    ("uplay_r1_loader.dll", must("ubisoftconnect", Platform)),
    // .NET runtime
    ("mscoree.dll", must("dotnet40", DotNet)),
    ("clr.dll", must("dotnet40", DotNet)),
    ("system.dll", must("dotnet40", DotNet)),
    // Visual C++ runtimes
    ("msvcp140.dll", must("vcrun2019", CppRuntime)),
    ("msvcp140_1.dll", must("vcrun2019", CppRuntime)),
    ("msvcp140_2.dll", must("vcrun2019", CppRuntime)),
    ("vcruntime140.dll", must("vcrun2019", CppRuntime)),
    ("vcruntime140_1.dll", must("vcrun2019", CppRuntime)),
    ("vcomp140.dll", must("vcrun2019", CppRuntime)),
    ("vcruntime150.dll", must("vcrun2022", CppRuntime)),
    ("msvcp150.dll", must("vcrun2022", CppRuntime)),
    ("vcomp150.dll", must("vcrun2022", CppRuntime)),
    ("msvcp60.dll", must("vcrun6", CppRuntime)),
    ("msvcrt.dll", must("vcrun6", CppRuntime)),
    ("msvcp71.dll", must("vcrun2003", CppRuntime)),
    ("msvcp80.dll", must("vcrun2005", CppRuntime)),
    ("msvcp90.dll", must("vcrun2008", CppRuntime)),
    ("msvcp100.dll", must("vcrun2010", CppRuntime)),
    ("msvcp110.dll", must("vcrun2012", CppRuntime)),
    ("msvcp120.dll", must("vcrun2013", CppRuntime)),
    ("mfc42.dll", must("mfc42", CppRuntime)),
    // System libraries
    ("msxml3.dll", must("msxml3", System)),
    ("msxml6.dll", must("msxml6", System)),
    ("quartz.dll", must("quartz", Media)),
    ("riched20.dll", must("riched20", System)),
    ("winhttp.dll", must("winhttp", System)),
    ("wininet.dll", must("wininet", System)),
    ("wsock32.dll", must("wsock32", System)),
    ("iphlpapi.dll", must("iphlpapi", System)),
    // Fonts
    ("tahoma.ttf", must("tahoma", Fonts)),
    ("arial.ttf", must("corefonts", Fonts)),
    // Provided by the base runtime; reported, never installed
    ("kernel32.dll", BUILTIN),
    ("ntdll.dll", BUILTIN),
    ("user32.dll", BUILTIN),
    ("gdi32.dll", BUILTIN),
    ("advapi32.dll", BUILTIN),
    ("shell32.dll", BUILTIN),
    ("shlwapi.dll", BUILTIN),
    ("ole32.dll", BUILTIN),
    ("oleaut32.dll", BUILTIN),
    ("comctl32.dll", BUILTIN),
    ("comdlg32.dll", BUILTIN),
    ("ws2_32.dll", BUILTIN),
    ("winmm.dll", BUILTIN),
    ("version.dll", BUILTIN),
    ("setupapi.dll", BUILTIN),
];

/// Look up a library name, case-insensitively.
pub fn lookup(library: &str) -> Option<&'static ComponentSpec> {
    let lowered = library.to_ascii_lowercase();
    DLL_MAP.iter().find(|(name, _)| *name == lowered).map(|(_, spec)| spec)
}

/// Whether a component installs through the environment manager rather
/// than through winetricks.
pub fn installs_via_manager(component_id: &str) -> bool {
    DLL_MAP
        .iter()
        .any(|(_, spec)| spec.id == component_id && spec.class == GraphicsTranslation)
}

/// The fixed install order: class rank first, then identifier.
pub fn install_order(a: &ComponentSpec, b: &ComponentSpec) -> Ordering {
    a.class
        .install_rank()
        .cmp(&b.class.install_rank())
        .then_with(|| a.id.cmp(b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let spec = lookup("D3DCompiler_47.DLL").unwrap();
        assert_eq!(spec.id, "d3dcompiler_47");
        assert!(lookup("unknown.dll").is_none());
    }

    #[test]
    fn vcrun_family_collapses_to_one_component() {
        for dll in ["msvcp140.dll", "vcruntime140.dll", "vcomp140.dll"] {
            assert_eq!(lookup(dll).unwrap().id, "vcrun2019");
        }
    }

    #[test]
    fn builtins_are_base_runtime() {
        let spec = lookup("kernel32.dll").unwrap();
        assert_eq!(spec.provided_by, Provenance::BaseRuntime);
    }

    #[test]
    fn graphics_translation_installs_via_manager() {
        assert!(installs_via_manager("dxvk"));
        assert!(installs_via_manager("vkd3d"));
        assert!(installs_via_manager("dxvk-nvapi"));
        assert!(!installs_via_manager("vcrun2019"));
    }

    #[test]
    fn install_order_puts_translation_layers_first() {
        let dxvk = lookup("d3d11.dll").unwrap();
        let vcrun = lookup("msvcp140.dll").unwrap();
        let d3dx = lookup("d3d9.dll").unwrap();
        assert_eq!(install_order(dxvk, vcrun), Ordering::Less);
        assert_eq!(install_order(vcrun, d3dx), Ordering::Less);
    }

    #[test]
    fn map_keys_are_lowercase_and_unique() {
        let mut seen = std::collections::HashSet::new();
        for (name, _) in DLL_MAP {
            assert_eq!(*name, name.to_ascii_lowercase());
            assert!(seen.insert(*name), "duplicate catalog key: {name}");
        }
    }
}
