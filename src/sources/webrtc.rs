//! WebRTC entropy source: private IPs surfaced by ICE gathering.
//!
//! A peer connection pointed at a public STUN server emits ICE candidates
//! carrying local interface addresses. Gathering races a hard 1000 ms
//! deadline: whatever was classified by then is the result. The returned
//! future never rejects; every setup failure degrades to an empty record.

use std::cell::RefCell;
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::rc::Rc;
use std::task::{Poll, Waker};

use futures::future::{self, poll_fn, Either};
use futures::pin_mut;
use gloo_timers::future::TimeoutFuture;
use js_sys::{Array, Function, Object, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    RtcIceGatheringState, RtcPeerConnection, RtcPeerConnectionIceEvent,
    RtcSessionDescriptionInit,
};

/// Hard wall-clock deadline for ICE gathering.
const GATHER_DEADLINE_MS: u32 = 1000;

const STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Host constructor keys, tried in order.
const PEER_CONNECTION_KEYS: [&str; 3] = [
    "RTCPeerConnection",
    "webkitRTCPeerConnection",
    "mozRTCPeerConnection",
];

/// Result record: deduplicated private IPv4s and non-link-local IPv6s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcIps {
    pub local_ipv4: Vec<String>,
    pub local_ipv6: Vec<String>,
    pub supported: bool,
}

impl WebRtcIps {
    fn unsupported() -> Self {
        Self {
            local_ipv4: Vec::new(),
            local_ipv6: Vec::new(),
            supported: false,
        }
    }

    fn empty_supported() -> Self {
        Self {
            local_ipv4: Vec::new(),
            local_ipv6: Vec::new(),
            supported: true,
        }
    }
}

struct GatherState {
    seen: HashSet<String>,
    ipv4: Vec<String>,
    ipv6: Vec<String>,
    done: bool,
    waker: Option<Waker>,
}

impl GatherState {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            ipv4: Vec::new(),
            ipv6: Vec::new(),
            done: false,
            waker: None,
        }
    }

    fn record(&mut self, candidate_line: &str) {
        let Some(address) = extract_candidate_address(candidate_line) else {
            return;
        };
        if !self.seen.insert(address.to_owned()) {
            return;
        }
        match classify_address(address) {
            Some(AddressClass::PrivateV4) => self.ipv4.push(address.to_owned()),
            Some(AddressClass::V6) => self.ipv6.push(address.to_owned()),
            None => {}
        }
    }

    /// Completion paths race (end-of-candidates, gathering-state change,
    /// deadline); the first one wins and the rest are no-ops.
    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

enum AddressClass {
    PrivateV4,
    V6,
}

/// Gather private IPs within the deadline. Resolves in well under 10 ms
/// when the host has no peer-connection constructor. Never rejects.
pub async fn get_webrtc_ips() -> WebRtcIps {
    let Some(constructor) = resolve_peer_connection() else {
        return WebRtcIps::unsupported();
    };
    match gather(&constructor).await {
        Ok(ips) => ips,
        Err(err) => {
            log::warn!("ICE gathering setup failed: {err:?}");
            WebRtcIps::empty_supported()
        }
    }
}

fn resolve_peer_connection() -> Option<Function> {
    let global = js_sys::global();
    PEER_CONNECTION_KEYS.iter().find_map(|key| {
        Reflect::get(&global, &JsValue::from_str(key))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
    })
}

async fn gather(constructor: &Function) -> Result<WebRtcIps, JsValue> {
    let config = Object::new();
    let ice_servers = Array::new();
    let stun = Object::new();
    Reflect::set(&stun, &JsValue::from_str("urls"), &JsValue::from_str(STUN_SERVER))?;
    ice_servers.push(&stun);
    Reflect::set(&config, &JsValue::from_str("iceServers"), &ice_servers)?;

    let pc: RtcPeerConnection =
        Reflect::construct(constructor, &Array::of1(&config))?.unchecked_into();

    let state = Rc::new(RefCell::new(GatherState::new()));

    let on_candidate = {
        let state = state.clone();
        Closure::wrap(Box::new(move |event: JsValue| {
            let event: RtcPeerConnectionIceEvent = event.unchecked_into();
            let mut st = state.borrow_mut();
            match event.candidate() {
                Some(candidate) => {
                    let line = candidate.candidate();
                    if !line.is_empty() {
                        st.record(&line);
                    }
                }
                // Null candidate signals end-of-candidates.
                None => st.finish(),
            }
        }) as Box<dyn FnMut(JsValue)>)
    };
    pc.set_onicecandidate(Some(on_candidate.as_ref().unchecked_ref()));

    let on_gathering_state = {
        let state = state.clone();
        let pc = pc.clone();
        Closure::wrap(Box::new(move |_: JsValue| {
            if pc.ice_gathering_state() == RtcIceGatheringState::Complete {
                state.borrow_mut().finish();
            }
        }) as Box<dyn FnMut(JsValue)>)
    };
    pc.set_onicegatheringstatechange(Some(on_gathering_state.as_ref().unchecked_ref()));

    let drive = async {
        // ICE gathering only starts once a media section exists and a
        // local offer is set; a data channel is the cheapest way to get one.
        let _channel = pc.create_data_channel("probe");
        let offer = JsFuture::from(pc.create_offer()).await?;
        let offer: RtcSessionDescriptionInit = offer.unchecked_into();
        JsFuture::from(pc.set_local_description(&offer)).await?;

        let completed = {
            let state = state.clone();
            poll_fn(move |cx| {
                let mut st = state.borrow_mut();
                if st.done {
                    Poll::Ready(())
                } else {
                    st.waker = Some(cx.waker().clone());
                    Poll::Pending
                }
            })
        };
        let deadline = TimeoutFuture::new(GATHER_DEADLINE_MS);
        pin_mut!(completed);
        pin_mut!(deadline);
        if let Either::Right(((), _)) = future::select(completed, deadline).await {
            log::debug!("ICE gathering hit the {GATHER_DEADLINE_MS} ms deadline");
        }
        Ok::<(), JsValue>(())
    };
    let outcome = drive.await;

    // Detach handlers before the closures drop, then release the host
    // resources on every completion path, including setup failures.
    pc.set_onicecandidate(None);
    pc.set_onicegatheringstatechange(None);
    pc.close();
    outcome?;

    let st = state.borrow();
    Ok(WebRtcIps {
        local_ipv4: st.ipv4.clone(),
        local_ipv6: st.ipv6.clone(),
        supported: true,
    })
}

/// Pull the connection address out of an ICE candidate line, e.g.
/// `candidate:842163049 1 udp 1677729535 192.168.1.7 47998 typ srflx ...`.
/// mDNS-obfuscated `.local` hostnames carry no entropy and are dropped.
fn extract_candidate_address(line: &str) -> Option<&str> {
    line.split_whitespace().find(|token| {
        !token.ends_with(".local")
            && (token.parse::<Ipv4Addr>().is_ok() || token.parse::<Ipv6Addr>().is_ok())
    })
}

fn classify_address(address: &str) -> Option<AddressClass> {
    if let Ok(v4) = address.parse::<Ipv4Addr>() {
        return is_private_ipv4(v4).then_some(AddressClass::PrivateV4);
    }
    if let Ok(v6) = address.parse::<Ipv6Addr>() {
        return (!is_link_local_ipv6(v6)).then_some(AddressClass::V6);
    }
    None
}

/// Private ranges: 10/8, 172.16/12, 192.168/16, 169.254/16. Public
/// addresses reflected by STUN are deliberately discarded.
fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    a == 10
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
        || (a == 169 && b == 254)
}

fn is_link_local_ipv6(ip: Ipv6Addr) -> bool {
    // fe80::/10
    (ip.segments()[0] & 0xffc0) == 0xfe80
}
