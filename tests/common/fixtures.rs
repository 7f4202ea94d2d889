//! Captured `svn status` reports used across tests

#![allow(dead_code)]

/// One modified, one unversioned and one conflicted file. The conflicted file
/// carries a tree-conflict description line.
pub const MIXED_REPORT: &str = "\
M       Assets/Scripts/Player.cs
?       Assets/Textures/new.png
C     C Assets/Scenes/Main.unity
      >   local file edit, incoming file delete or move upon update
Summary of conflicts:
  Text conflicts: 1
  Tree conflicts: 1
";

/// A file moved from Old.cs to New.cs, with both continuation lines
pub const MOVED_REPORT: &str = "\
D       Assets/Old.cs
        > moved to Assets/New.cs
A  +    Assets/New.cs
        > moved from Assets/Old.cs
";

/// Modified file with a trailing path terminator
pub const TERMINATED_REPORT: &str = "M       Assets/Foo.cs@\n";

/// A modified asset whose `.meta` sidecar is locked in this working copy
pub const SIDECAR_REPORT: &str = "\
M       Assets/Foo.cs
     K  Assets/Foo.cs.meta
?       Assets/New.png
";

/// Online report: the prefab is out of date and locked by somebody else
pub const ONLINE_REPORT: &str = "\
M             1200   Assets/Foo.cs
     O  *     1200   Assets/Hero.prefab
Status against revision:   1234
";

/// A status line with an unknown code
pub const MALFORMED_REPORT: &str = "Z       Assets/Broken.cs\n";
