// Backend selection, reply parsing and the Hyprland IPC round trip

#[cfg(test)]
mod tests {
    use crate::model::geometry::ScreenRect;
    use crate::tracker::fallback::DeviceDeltaCursor;
    use crate::tracker::gnome::{parse_gdbus_output, parse_pointer_json};
    use crate::tracker::hyprland::{HyprlandCursor, parse_cursorpos, socket_candidates};
    use crate::tracker::{
        BackendKind, CursorSample, CursorTracker, Platform, SessionEnv, candidate_order,
        create_cursor_tracker,
    };
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::os::unix::net::UnixListener;
    use std::path::Path;
    use std::thread;
    use tempfile::tempdir;

    fn env_from(platform: Platform, vars: &[(&str, &str)]) -> SessionEnv {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SessionEnv::from_lookup(platform, |key| map.get(key).cloned())
    }

    #[test]
    fn test_order_on_hyprland() {
        let env = env_from(
            Platform::Linux,
            &[
                ("WAYLAND_DISPLAY", "wayland-1"),
                ("HYPRLAND_INSTANCE_SIGNATURE", "abc"),
                ("XDG_CURRENT_DESKTOP", "Hyprland"),
            ],
        );
        assert_eq!(
            candidate_order(&env, None),
            vec![
                BackendKind::Hyprland,
                BackendKind::Hybrid,
                BackendKind::X11,
                BackendKind::Fallback
            ]
        );
    }

    #[test]
    fn test_order_on_gnome_and_kde_wayland() {
        let gnome = env_from(
            Platform::Linux,
            &[("XDG_SESSION_TYPE", "wayland"), ("XDG_CURRENT_DESKTOP", "ubuntu:GNOME")],
        );
        assert_eq!(candidate_order(&gnome, None)[0], BackendKind::Gnome);

        let kde = env_from(
            Platform::Linux,
            &[("WAYLAND_DISPLAY", "wayland-0"), ("XDG_CURRENT_DESKTOP", "KDE")],
        );
        assert_eq!(
            candidate_order(&kde, None),
            vec![
                BackendKind::Kde,
                BackendKind::Hybrid,
                BackendKind::X11,
                BackendKind::Fallback
            ]
        );
    }

    #[test]
    fn test_order_on_plain_x11() {
        let env = env_from(
            Platform::Linux,
            &[("XDG_SESSION_TYPE", "x11"), ("XDG_CURRENT_DESKTOP", "GNOME")],
        );
        assert!(!env.wayland);
        assert_eq!(
            candidate_order(&env, None),
            vec![BackendKind::X11, BackendKind::Fallback]
        );
    }

    #[test]
    fn test_empty_wayland_display_is_ignored() {
        let env = env_from(Platform::Linux, &[("WAYLAND_DISPLAY", "")]);
        assert!(!env.wayland);
    }

    #[test]
    fn test_order_on_windows_and_other() {
        let win = env_from(Platform::Windows, &[]);
        assert_eq!(
            candidate_order(&win, None),
            vec![BackendKind::Win32, BackendKind::Fallback]
        );
        let other = env_from(Platform::Other, &[]);
        assert_eq!(candidate_order(&other, None), vec![BackendKind::Fallback]);
    }

    #[test]
    fn test_preference_restricts_order() {
        let env = env_from(Platform::Linux, &[("WAYLAND_DISPLAY", "wayland-1")]);
        assert_eq!(
            candidate_order(&env, Some(BackendKind::X11)),
            vec![BackendKind::X11, BackendKind::Fallback]
        );
        assert_eq!(
            candidate_order(&env, Some(BackendKind::Fallback)),
            vec![BackendKind::Fallback]
        );
    }

    #[test]
    fn test_unavailable_preference_falls_back() {
        let env = env_from(Platform::Other, &[]);
        let screen = ScreenRect::new(0.0, 0.0, 800.0, 600.0);
        let mut tracker = create_cursor_tracker(&env, Some(BackendKind::Win32), screen);
        #[cfg(not(target_os = "windows"))]
        assert_eq!(tracker.kind(), BackendKind::Fallback);
        let _ = tracker.query();
    }

    #[test]
    fn test_fallback_integrates_device_motion() {
        let mut tracker = DeviceDeltaCursor::new(ScreenRect::new(0.0, 0.0, 800.0, 600.0));
        assert_eq!(tracker.query(), CursorSample::new(400.0, 300.0, false));

        tracker.on_device_motion(50.0, -20.0);
        tracker.on_device_button(true);
        assert_eq!(tracker.query(), CursorSample::new(450.0, 280.0, true));

        tracker.on_device_motion(10_000.0, 10_000.0);
        assert_eq!(tracker.query(), CursorSample::new(799.0, 599.0, true));
        assert!(!tracker.needs_dpr_scaling());
    }

    #[test]
    fn test_parse_cursorpos() {
        assert_eq!(parse_cursorpos("1234, 567\n").unwrap(), (1234.0, 567.0));
        assert!(parse_cursorpos("unknown request").is_err());
        assert!(parse_cursorpos("1, 2, 3").is_err());
    }

    #[test]
    fn test_socket_candidates() {
        let c = socket_candidates(Some(Path::new("/run/user/1000")), "sig");
        assert_eq!(c[0], Path::new("/run/user/1000/hypr/sig/.socket.sock"));
        assert_eq!(c[1], Path::new("/tmp/hypr/sig/.socket.sock"));
        let c = socket_candidates(None, "sig");
        assert_eq!(c[0], c[1]);
    }

    #[test]
    fn test_hyprland_ipc_round_trip() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join(".socket.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = thread::spawn(move || {
            for (i, stream) in listener.incoming().take(2).enumerate() {
                let mut stream = stream.unwrap();
                let mut buf = [0u8; 64];
                let n = stream.read(&mut buf).unwrap();
                assert_eq!(&buf[..n], b"cursorpos");
                let reply = format!("{}, 200", 100 + i);
                stream.write_all(reply.as_bytes()).unwrap();
            }
        });

        let mut tracker = HyprlandCursor::with_socket(socket_path).unwrap();
        let sample = tracker.query();
        server.join().unwrap();

        assert_eq!(sample, CursorSample::new(101.0, 200.0, false));
        assert_eq!(tracker.kind(), BackendKind::Hyprland);
        assert!(!tracker.needs_dpr_scaling());
    }

    #[test]
    fn test_hyprland_query_keeps_last_sample_on_error() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join(".socket.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 64];
            let _ = stream.read(&mut buf).unwrap();
            stream.write_all(b"10, 20").unwrap();
        });

        let mut tracker = HyprlandCursor::with_socket(socket_path.clone()).unwrap();
        server.join().unwrap();
        std::fs::remove_file(&socket_path).unwrap();

        assert_eq!(tracker.query(), CursorSample::new(10.0, 20.0, false));
    }

    #[test]
    fn test_parse_pointer_json() {
        let s = parse_pointer_json("[812, 433, 256]").unwrap();
        assert_eq!(s, CursorSample::new(812.0, 433.0, true));
        let s = parse_pointer_json("[1, 2, 16]").unwrap();
        assert!(!s.pressed);
        assert!(parse_pointer_json("{}").is_err());
        assert!(parse_pointer_json("[1, 2]").is_err());
    }

    #[test]
    fn test_parse_gdbus_output() {
        let s = parse_gdbus_output("(true, '[812, 433, 0]')\n").unwrap();
        assert_eq!(s, CursorSample::new(812.0, 433.0, false));

        let s = parse_gdbus_output("(true, '[5,6,272]')").unwrap();
        assert!(s.pressed);

        assert!(parse_gdbus_output("(false, '')").is_err());
        assert!(parse_gdbus_output("[a, b] [1, 2, 3]").is_ok());
    }
}
